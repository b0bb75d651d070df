pub mod client;
pub mod contract;
pub mod employee;
pub mod enterprise_order;
pub mod equipment;
pub mod evaluation;
pub mod expense;
pub mod intervention;
pub mod leave_request;
pub mod notification;
pub mod purchase_order;
pub mod quote;
pub mod recruitment;
pub mod salary;
pub mod stock;
pub mod supplier;
pub mod tax;
pub mod user;

pub use client::Client;
pub use contract::Contract;
pub use employee::Employee;
pub use enterprise_order::{EnterpriseOrder, EnterpriseOrderItem};
pub use equipment::Equipment;
pub use evaluation::Evaluation;
pub use expense::Expense;
pub use intervention::Intervention;
pub use leave_request::LeaveRequest;
pub use notification::Notification;
pub use purchase_order::{PurchaseOrder, PurchaseOrderItem};
pub use quote::{Quote, QuoteItem};
pub use recruitment::{RecruitmentApplication, RecruitmentRequest};
pub use salary::Salary;
pub use stock::{Stock, StockMovement};
pub use supplier::Supplier;
pub use tax::Tax;
pub use user::User;
