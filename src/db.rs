use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema};
use std::path::Path;
use tokio::fs;

use crate::{alliance, battle, info, profile, resource, warn};

/// 初始化数据库连接
pub async fn init(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    // sqlite:path/to/file.db?mode=rwc 需要父目录存在
    if let Some(file) = sqlite_file(db_url)
        && let Some(parent) = Path::new(file).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        // 失败时仍尝试连接，由连接错误决定是否退出
        if let Err(e) = fs::create_dir_all(parent).await {
            warn!(target: "Database", "无法创建数据库目录 {:?}: {}", parent, e);
        }
    }

    let db = Database::connect(db_url).await?;

    info!(target: "Database", "连接成功: {}", db_url);

    Ok(db)
}

/// 建表与索引，已存在的会被跳过
pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    profile::entity::init_schema(db).await?;
    alliance::entity::init_schema(db).await?;
    resource::entity::init_schema(db).await?;
    battle::entity::init_schema(db).await?;
    Ok(())
}

pub async fn create_table<E>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();

    db.execute(builder.build(&stmt)).await?;
    Ok(())
}

pub async fn create_index(
    db: &DatabaseConnection,
    mut stmt: IndexCreateStatement,
) -> Result<(), DbErr> {
    let builder = db.get_database_backend();
    stmt.if_not_exists();
    db.execute(builder.build(&stmt)).await?;
    Ok(())
}

/// 便于各实体模块书写索引
pub fn index(name: &str) -> IndexCreateStatement {
    Index::create().name(name).to_owned()
}

fn sqlite_file(db_url: &str) -> Option<&str> {
    let rest = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))?;
    let file = rest.split('?').next()?;
    if file.is_empty() || file.starts_with(":memory:") {
        None
    } else {
        Some(file)
    }
}
