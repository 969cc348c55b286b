use sea_orm::DatabaseConnection;
use tempfile::TempDir;

use sanzhan::alliance::diff::{self, Group, Metric};
use sanzhan::alliance::parser::{self, MemberRow};
use sanzhan::alliance::storage::{self, SaveOutcome};
use sanzhan::db;

async fn setup() -> (TempDir, DatabaseConnection) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").display());
    let conn = db::init(&url).await.unwrap();
    db::setup_schema(&conn).await.unwrap();
    (dir, conn)
}

fn member(name: &str, group: &str, battle: i64) -> MemberRow {
    MemberRow {
        rank: 0,
        name: name.to_string(),
        group_name: group.to_string(),
        contribution: 0,
        power: 0,
        battle_achievement: battle,
        assist: 0,
        donation: 0,
    }
}

async fn save(conn: &DatabaseConnection, filename: &str, rows: &[MemberRow]) -> SaveOutcome {
    storage::save_snapshot(conn, filename, parser::parse_stats_time(filename), rows)
        .await
        .unwrap()
}

fn saved_id(outcome: SaveOutcome) -> i32 {
    match outcome {
        SaveOutcome::Saved { id, .. } => id,
        SaveOutcome::Duplicate => panic!("unexpected duplicate"),
    }
}

#[tokio::test]
async fn same_stats_time_is_skipped() {
    let (_dir, conn) = setup().await;
    let rows = vec![member("甲", "G1", 100)];

    let first = save(&conn, "同盟统计2025年01月25日13时30分12秒.csv", &rows).await;
    assert!(matches!(first, SaveOutcome::Saved { count: 1, .. }));

    // 文件名不同但统计时间相同
    let name = "副本_同盟统计2025年01月25日13时30分12秒.csv";
    assert!(
        storage::is_duplicate(&conn, name, parser::parse_stats_time(name))
            .await
            .unwrap()
    );
    let second = save(&conn, name, &rows).await;
    assert_eq!(second, SaveOutcome::Duplicate);

    let uploads = storage::list_uploads(&conn).await.unwrap();
    assert_eq!(uploads.len(), 1);
    let members = storage::load_members(&conn, uploads[0].id).await.unwrap();
    assert_eq!(members.len(), 1);
}

#[tokio::test]
async fn filename_is_the_key_without_stats_time() {
    let (_dir, conn) = setup().await;
    let rows = vec![member("甲", "G1", 100)];

    saved_id(save(&conn, "roster.csv", &rows).await);
    assert_eq!(save(&conn, "roster.csv", &rows).await, SaveOutcome::Duplicate);
    saved_id(save(&conn, "roster2.csv", &rows).await);

    assert_eq!(storage::list_uploads(&conn).await.unwrap().len(), 2);
}

#[tokio::test]
async fn compare_two_stored_snapshots() {
    let (_dir, conn) = setup().await;

    // 先上传较晚的统计
    let late = saved_id(
        save(
            &conn,
            "同盟统计2025年02月01日20时00分00秒.csv",
            &[member("甲", "G1", 150), member("乙", "G1", 50)],
        )
        .await,
    );
    let early = saved_id(
        save(
            &conn,
            "同盟统计2025年01月25日20时00分00秒.csv",
            &[member("甲", "G1", 100)],
        )
        .await,
    );

    let a = storage::find_upload(&conn, late).await.unwrap().unwrap();
    let b = storage::find_upload(&conn, early).await.unwrap().unwrap();
    let (first, second) = diff::order_snapshots(&a, &b);
    assert_eq!(first.id, early);
    assert_eq!(second.id, late);

    let earlier = storage::load_members(&conn, first.id).await.unwrap();
    let later = storage::load_members(&conn, second.id).await.unwrap();
    let rows = diff::diff(&earlier, &later, Metric::parse("battle"));

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "甲");
    assert_eq!(rows[0].group, Group::Assigned("G1".to_string()));
    assert_eq!(rows[0].diff, 50);
    assert_eq!(rows[0].early_val, 100);
    assert_eq!(rows[0].late_val, 150);
}

#[tokio::test]
async fn delete_removes_record_and_members() {
    let (_dir, conn) = setup().await;
    let id = saved_id(
        save(
            &conn,
            "a.csv",
            &[member("甲", "G1", 1), member("乙", "G2", 2)],
        )
        .await,
    );
    assert_eq!(storage::detail_rows(&conn, id).await.unwrap().len(), 2);

    assert!(storage::delete_snapshot(&conn, id).await.unwrap());
    assert!(storage::find_upload(&conn, id).await.unwrap().is_none());
    assert!(storage::detail_rows(&conn, id).await.unwrap().is_empty());

    assert!(!storage::delete_snapshot(&conn, id).await.unwrap());

    // 删除后同名文件可以重新导入
    saved_id(save(&conn, "a.csv", &[member("甲", "G1", 1)]).await);
}

#[tokio::test]
async fn member_history_follows_stats_time() {
    let (_dir, conn) = setup().await;
    save(
        &conn,
        "同盟统计2025年03月01日08时00分00秒.csv",
        &[member("甲", "G2", 300)],
    )
    .await;
    save(
        &conn,
        "同盟统计2025年01月01日08时00分00秒.csv",
        &[member("甲", "G1", 100), member("乙", "G1", 7)],
    )
    .await;

    let history = storage::member_history(&conn, "甲").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].display_time, "2025-01-01 08:00");
    assert_eq!(history[0].battle, 100);
    assert_eq!(history[1].display_time, "2025-03-01 08:00");
    assert_eq!(history[1].group_name, "G2");

    assert!(storage::member_history(&conn, "无名").await.unwrap().is_empty());
}

#[tokio::test]
async fn parsed_gb18030_roster_round_trips_through_storage() {
    let (_dir, conn) = setup().await;
    let csv = "排名,成员,分组,战功,势力值\n1,张飞,先锋,\"1,200\",30000\n2,,先锋,5,5\n3,关羽,,800,-3\n";
    let (bytes, _, _) = encoding_rs::GB18030.encode(csv);

    let (text, encoding) = parser::decode(&bytes).unwrap();
    assert_eq!(encoding, "gb18030");
    let parsed = parser::parse_roster(&text);
    assert_eq!(parsed.rows.len(), 2);

    let id = saved_id(save(&conn, "gb.csv", &parsed.rows).await);
    let rows = storage::detail_rows(&conn, id).await.unwrap();
    assert_eq!(rows[0].name, "张飞");
    assert_eq!(rows[0].battle_achievement, 1200);
    assert_eq!(rows[1].name, "关羽");
    assert_eq!(rows[1].group_name, parser::UNGROUPED);
    assert_eq!(rows[1].power, 0);
}
