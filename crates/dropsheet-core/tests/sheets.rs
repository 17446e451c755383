use std::fs;

use dropsheet_core::collaborators::{SheetPublisher, SheetTarget};
use dropsheet_core::sheets::CsvPublisher;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn csv_publisher_appends_and_replaces() {
    let dir = std::env::temp_dir().join(format!("dropsheet-sheets-{}", Uuid::new_v4()));
    let publisher = CsvPublisher::new(&dir);
    let daily = SheetTarget::new("Veve Tracker Daily", "Transfers");
    let drops = SheetTarget::new("Veve Drops", "All");

    publisher
        .append(&daily, vec![json!("2024-01-01"), json!(10)])
        .await
        .expect("first append");
    publisher
        .append(&daily, vec![json!("2024-01-02"), json!("")])
        .await
        .expect("second append");

    let appended = fs::read_to_string(publisher.tab_path(&daily)).expect("read tab");
    assert_eq!(appended, "2024-01-01,10\n2024-01-02,\n");

    publisher
        .replace(&drops, vec!["brand".into(), "series".into()], vec![vec![json!("X"), json!("S1")]])
        .await
        .expect("first replace");
    publisher
        .replace(
            &drops,
            vec!["brand".into(), "series".into()],
            vec![vec![json!("P"), json!("Saga #3")]],
        )
        .await
        .expect("second replace");

    let replaced = fs::read_to_string(publisher.tab_path(&drops)).expect("read tab");
    assert_eq!(replaced, "brand,series\nP,Saga #3\n");

    fs::remove_dir_all(&dir).ok();
}
