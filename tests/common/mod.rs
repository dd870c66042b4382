//! 集成测试公共设施
//!
//! 每个测试用一个临时工作目录和独立的 SQLite 数据库，直接驱动
//! SessionManager / OrderEngine，不经过 HTTP 层。

use std::sync::Arc;

use tableside::auth::IpRateLimiter;
use tableside::db::models::{DiningTable, ItemStatus, MenuItem, SessionMode, TableStatus};
use tableside::db::repository::{dining_table as table_repo, menu_item as menu_repo};
use tableside::db::DbService;
use tableside::sessions::OpenedSession;
use tableside::{Config, EventDispatcher, OrderEngine, SessionManager};
use tempfile::TempDir;

pub struct Harness {
    _dir: TempDir,
    pub config: Config,
    pub db: DbService,
    pub dispatcher: Arc<EventDispatcher>,
    pub sessions: Arc<SessionManager>,
    pub orders: Arc<OrderEngine>,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::with_overrides(dir.path().to_string_lossy(), 0);
        config
            .ensure_work_dir_structure()
            .expect("work dir structure");

        let db_path = config.database_dir().join("tableside.db");
        let db = DbService::new(&db_path.to_string_lossy())
            .await
            .expect("database");

        let dispatcher = EventDispatcher::new();
        let limiter = Arc::new(IpRateLimiter::new(10_000));
        let sessions = Arc::new(SessionManager::new(
            db.pool.clone(),
            config.clone(),
            dispatcher.clone(),
            limiter,
        ));
        let orders = Arc::new(OrderEngine::new(db.pool.clone(), dispatcher.clone(), &config));

        Self {
            _dir: dir,
            config,
            db,
            dispatcher,
            sessions,
            orders,
        }
    }

    pub async fn seed_table(&self, id: &str) {
        table_repo::create(
            &self.db.pool,
            DiningTable {
                id: id.to_string(),
                name: id.to_string(),
                zone_id: None,
                capacity: 4,
                status: TableStatus::Free,
                is_active: true,
            },
        )
        .await
        .expect("seed table");
    }

    /// Seed a menu item; `stock = Some(n)` creates a tracked counter,
    /// `None` leaves the item unlimited.
    pub async fn seed_item(&self, id: &str, price_cents: i64, stock: Option<i64>) {
        self.seed_item_full(id, price_cents, stock, false).await;
    }

    pub async fn seed_item_full(
        &self,
        id: &str,
        price_cents: i64,
        stock: Option<i64>,
        auto_hide_when_zero: bool,
    ) {
        menu_repo::insert(
            &self.db.pool,
            &MenuItem {
                id: id.to_string(),
                restaurant_id: self.config.restaurant_id.clone(),
                name: id.to_string(),
                price_cents,
                tax_percent: 0,
                station: "KITCHEN".to_string(),
                status: ItemStatus::Active,
                track_stock: stock.is_some(),
                auto_hide_when_zero,
                max_per_order: 99,
            },
        )
        .await
        .expect("seed menu item");

        if stock.is_some() {
            menu_repo::set_stock(&self.db.pool, &self.config.restaurant_id, id, stock)
                .await
                .expect("seed stock");
        }
    }

    pub async fn open_session(&self, table_id: &str) -> OpenedSession {
        self.seed_table(table_id).await;
        self.sessions
            .open(table_id, SessionMode::Family, "staff-1")
            .await
            .expect("open session")
    }

    pub async fn stock_of(&self, menu_item_id: &str) -> Option<i64> {
        let mut conn = self.db.pool.acquire().await.expect("conn");
        menu_repo::find_stock(&mut conn, menu_item_id)
            .await
            .expect("find stock")
            .and_then(|s| s.quantity)
    }

    pub async fn table_status(&self, table_id: &str) -> TableStatus {
        let mut conn = self.db.pool.acquire().await.expect("conn");
        table_repo::find_by_id(&mut conn, table_id)
            .await
            .expect("find table")
            .expect("table exists")
            .status
    }
}

/// A wrong PIN that never collides with the minted one
pub fn wrong_pin(actual: &str) -> String {
    if actual == "0000" {
        "0001".to_string()
    } else {
        "0000".to_string()
    }
}
