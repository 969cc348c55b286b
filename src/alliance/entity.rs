use sea_orm::DatabaseConnection;
use sea_orm::DbErr;

use crate::db;

pub mod upload_record {
    use sea_orm::entity::prelude::*;
    use serde::Serialize;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
    #[sea_orm(table_name = "upload_records")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub filename: String,
        // "stats:<时间>" 或 "file:<文件名>"，唯一约束兜底并发上传
        #[sea_orm(unique)]
        #[serde(skip)]
        pub dedup_key: String,
        pub upload_time: DateTime,
        pub stats_time: Option<DateTime>,
        pub member_count: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl Model {
        /// 展示与排序用的时间，优先统计时间
        pub fn effective_time(&self) -> DateTime {
            self.stats_time.unwrap_or(self.upload_time)
        }
    }
}

pub mod alliance_data {
    use sea_orm::entity::prelude::*;
    use serde::Serialize;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
    #[sea_orm(table_name = "alliance_data")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub upload_id: i32,
        pub rank: i64,
        pub name: String,
        pub group_name: String,
        pub contribution: i64,
        pub power: i64,
        pub battle_achievement: i64,
        pub assist: i64,
        pub donation: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub async fn init_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    db::create_table(db, upload_record::Entity).await?;
    db::create_table(db, alliance_data::Entity).await?;

    db::create_index(
        db,
        db::index("idx_alliance_data_upload")
            .table(alliance_data::Entity)
            .col(alliance_data::Column::UploadId)
            .to_owned(),
    )
    .await?;
    db::create_index(
        db,
        db::index("idx_alliance_data_name")
            .table(alliance_data::Entity)
            .col(alliance_data::Column::Name)
            .to_owned(),
    )
    .await
}
