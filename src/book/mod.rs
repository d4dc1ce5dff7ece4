// Order book state management
// Maintains real-time price-level state from exchange book feeds

pub mod order_book;

pub use order_book::{
    BookAction, BookMessage, BookSnapshot, OrderedFloat, PriceLevel, PriceLevelBook, SharedBook,
    Side, TradeSide, UpdateRecord,
};
