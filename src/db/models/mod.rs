//! Database models
//!
//! Row types shared by repositories and API handlers. Status enums are
//! stored as TEXT and round-trip through `sqlx::Type`.

pub mod cart;
pub mod dining_table;
pub mod idempotency;
pub mod menu_item;
pub mod order;
pub mod session;
pub mod suspicious;

pub use cart::{CartItem, SHARED_DEVICE};
pub use dining_table::{DiningTable, TableStatus, Zone};
pub use idempotency::{IdempotencyRecord, IdempotencyState};
pub use menu_item::{ItemStatus, MenuItem, Stock};
pub use order::{ItemModifier, Order, OrderItem, OrderItemStatus, OrderLine, OrderStatus};
pub use session::{CustomerToken, Session, SessionMode, SessionStatus};
pub use suspicious::{SuspiciousOrder, SuspiciousStatus};
