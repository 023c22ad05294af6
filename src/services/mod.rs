//! Services layer - Business logic
//!
//! Services are responsible for:
//! - Implementing business rules
//! - Validating input before it reaches the repositories
//! - Mapping repository failures into `ServiceError`

pub mod article;
pub mod category;
pub mod email;
pub mod error;
pub mod password;
pub mod product;
pub mod token;
pub mod user;
pub mod validation;

pub use article::ArticleService;
pub use category::CategoryService;
pub use email::{DynMailer, Mailer, NoopMailer, SmtpMailer};
pub use error::{ServiceError, ServiceResult};
pub use password::{hash_password, verify_password};
pub use product::ProductService;
pub use token::{Claims, TokenKind, TokenPair, TokenService};
pub use user::UserService;
pub use validation::generate_slug;
