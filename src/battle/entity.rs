use sea_orm::DatabaseConnection;
use sea_orm::DbErr;

use crate::db;

pub mod battle_merit {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "battle_merits")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub openid: String,
        pub merit_value: i64,
        pub image_filename: String,
        pub image_create_time: Option<DateTime>,
        pub file_md5: String,
        pub created_at: DateTime,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub async fn init_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    db::create_table(db, battle_merit::Entity).await?;
    // 同一用户同一张截图只能提交一次
    db::create_index(
        db,
        db::index("idx_battle_merits_openid_md5")
            .table(battle_merit::Entity)
            .col(battle_merit::Column::Openid)
            .col(battle_merit::Column::FileMd5)
            .unique()
            .to_owned(),
    )
    .await
}
