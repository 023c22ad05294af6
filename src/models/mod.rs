//! Data models
//!
//! Models represent:
//! - Database entities (User, Category, Article, Product, RefreshToken)
//! - Service inputs and list filters
//! - Pagination types

mod article;
mod category;
mod pagination;
mod product;
mod refresh_token;
mod user;

pub use article::{Article, ArticleFilter, ArticleStatus, CreateArticleInput, UpdateArticleInput};
pub use category::{Category, CreateCategoryInput, UpdateCategoryInput};
pub use pagination::{ListParams, PagedResult, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use product::{CreateProductInput, Product, ProductFilter, UpdateProductInput};
pub use refresh_token::RefreshToken;
pub use user::{
    ChangePasswordInput, LoginInput, RegisterInput, UpdateUserInput, User, UserFilter, UserRole,
};
