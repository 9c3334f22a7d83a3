/// 数据库访问层

pub mod models;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::info;

/// 建立数据库连接 (SeaORM)
pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, anyhow::Error> {
    info!("正在连接数据库: {}", database_url);

    let mut options = ConnectOptions::new(database_url.to_string());
    options.sqlx_logging(false);
    // 内存 SQLite 每个连接都是独立的库，只能保留一个连接
    if database_url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }

    let db = Database::connect(options).await?;
    info!("数据库连接成功");

    Ok(db)
}

/// 按实体定义建表（已存在则跳过）
pub async fn init_schema(db: &DatabaseConnection) -> Result<(), anyhow::Error> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut users = schema.create_table_from_entity(models::user::Entity);
    users.if_not_exists();
    db.execute(backend.build(&users)).await?;

    info!("数据表检查完成");
    Ok(())
}
