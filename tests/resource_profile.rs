use sea_orm::DatabaseConnection;
use tempfile::TempDir;

use sanzhan::db;
use sanzhan::hex::HexPos;
use sanzhan::profile;
use sanzhan::resource::relocate::{GridBuckets, RelocationParams};
use sanzhan::resource::{self, loader};

async fn setup() -> (TempDir, DatabaseConnection) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").display());
    let conn = db::init(&url).await.unwrap();
    db::setup_schema(&conn).await.unwrap();
    (dir, conn)
}

const S1: &str = "郡,等级,X,Y\n豫州,8铜,100,100\n豫州,8铜,102,100\n豫州,8铜,100,150\n冀州,8铜,400,400\n";

#[tokio::test]
async fn seasons_are_loaded_once() {
    let (dir, conn) = setup().await;
    let res_dir = dir.path().join("resources");
    std::fs::create_dir_all(&res_dir).unwrap();
    std::fs::write(res_dir.join("S1.csv"), S1).unwrap();
    std::fs::write(res_dir.join("S2.csv"), "county,level,x,y\n凉州,7铁,5,5\n").unwrap();
    std::fs::write(res_dir.join("readme.txt"), "ignored").unwrap();

    assert_eq!(loader::load_seasons(&conn, &res_dir).await.unwrap(), 5);
    // 已有数据的赛季不会重复导入
    assert_eq!(loader::load_seasons(&conn, &res_dir).await.unwrap(), 0);

    let seasons = resource::list_seasons(&conn).await.unwrap();
    assert_eq!(seasons, vec!["S1".to_string(), "S2".to_string()]);
    assert_eq!(resource::load_season(&conn, "S1").await.unwrap().len(), 4);
}

#[tokio::test]
async fn missing_resource_dir_is_created() {
    let (dir, conn) = setup().await;
    let res_dir = dir.path().join("nope");
    assert_eq!(loader::load_seasons(&conn, &res_dir).await.unwrap(), 0);
    assert!(res_dir.exists());
}

#[tokio::test]
async fn nearest_and_relocation_from_stored_points() {
    let (dir, conn) = setup().await;
    std::fs::write(dir.path().join("S1.csv"), S1).unwrap();
    loader::load_seasons(&conn, dir.path()).await.unwrap();

    let points = resource::load_season(&conn, "S1").await.unwrap();
    let start = HexPos::new(100, 100);

    let nearest = resource::find_nearest(&points, start, "8铜", 40).unwrap();
    assert_eq!(nearest.county, "豫州");
    let distances: Vec<u64> = nearest.points.iter().map(|p| p.distance).collect();
    assert_eq!(distances, vec![0, 2, 50]);

    let relocation = resource::find_relocation(
        &points,
        start,
        "8铜",
        &RelocationParams::default(),
        &GridBuckets,
    )
    .unwrap();
    assert_eq!(relocation.county, "豫州");
    let top = &relocation.candidates[0];
    assert_eq!(top.score_near, 2);

    let near_cluster = relocation
        .candidates
        .iter()
        .position(|c| c.x == 101 && c.y == 100)
        .unwrap();
    let near_lone = relocation
        .candidates
        .iter()
        .position(|c| c.x == 100 && c.y == 130);
    if let Some(lone) = near_lone {
        assert!(near_cluster < lone);
    }

    assert!(resource::find_nearest(&[], start, "8铜", 40).is_none());
}

#[tokio::test]
async fn login_creates_then_counts() {
    let (_dir, conn) = setup().await;

    let first = profile::record_login(&conn, "MOCK_OPENID_x").await.unwrap();
    assert_eq!(first.login_count, 1);
    assert_eq!(first.registration_time, first.last_login_time);

    let second = profile::record_login(&conn, "MOCK_OPENID_x").await.unwrap();
    assert_eq!(second.login_count, 2);
    assert_eq!(second.registration_time, first.registration_time);
    assert!(second.last_login_time >= first.last_login_time);
}

#[tokio::test]
async fn profile_updates_only_touch_given_fields() {
    let (_dir, conn) = setup().await;
    profile::record_login(&conn, "o1").await.unwrap();

    let update = profile::ProfileUpdate {
        nickname: Some("阿斗".to_string()),
        ..Default::default()
    };
    let user = profile::update_profile(&conn, "o1", update)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.nickname.as_deref(), Some("阿斗"));
    assert!(user.avatar_url.is_none());

    let user = profile::set_season(&conn, "o1", "S3").await.unwrap().unwrap();
    assert_eq!(user.season.as_deref(), Some("S3"));
    assert_eq!(user.nickname.as_deref(), Some("阿斗"));

    let user = profile::set_alliance_name(&conn, "o1", "蜀汉")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.alliance_name.as_deref(), Some("蜀汉"));

    assert!(
        profile::set_season(&conn, "missing", "S3")
            .await
            .unwrap()
            .is_none()
    );
}
