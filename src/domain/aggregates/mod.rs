//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod user;

pub use product::{Product, ProductError, ProductPatch, NewProduct};
pub use order::{Order, OrderError, OrderItem, OrderRecord, OrderStatus, PaymentRef, SalesReport};
pub use cart::{Cart, CartChange, CartError, CartLine, CartRecord, CartStatus, CartView, OrderDraft};
pub use user::{User, UserError};
