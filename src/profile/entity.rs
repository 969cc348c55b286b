use sea_orm::DatabaseConnection;
use sea_orm::DbErr;

use crate::db;

pub mod user {
    use sea_orm::entity::prelude::*;
    use serde::Serialize;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub openid: String,
        pub nickname: Option<String>,
        pub avatar_url: Option<String>,
        pub registration_time: DateTime,
        pub last_login_time: DateTime,
        pub login_count: i32,
        // 游戏内资料
        pub role_name: Option<String>,
        pub role_id: Option<String>,
        pub server_info: Option<String>,
        pub zone: Option<String>,
        pub team_name: Option<String>,
        pub season: Option<String>,
        pub alliance_name: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub async fn init_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    db::create_table(db, user::Entity).await
}
