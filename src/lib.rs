pub mod error;
pub mod feed;
pub mod session;

pub use error::AppError;
pub use feed::types::{
    ConnectionState, DisplayUpdate, FeedConfig, FeedEvent, FeedStatusSnapshot, NewsItem,
    PricePoint, StartFeedArgs, TickEvent,
};
pub use feed::window::PriceWindow;
pub use session::DashboardSession;
