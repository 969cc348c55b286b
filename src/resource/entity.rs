use sea_orm::DatabaseConnection;
use sea_orm::DbErr;

use crate::db;

pub mod resource_point {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "resource_points")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub season: String,
        pub county: String,
        pub level: String, // 例如 "8铜"
        pub x: i32,
        pub y: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub async fn init_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    db::create_table(db, resource_point::Entity).await?;
    db::create_index(
        db,
        db::index("idx_resource_points_season_county")
            .table(resource_point::Entity)
            .col(resource_point::Column::Season)
            .col(resource_point::Column::County)
            .to_owned(),
    )
    .await
}
