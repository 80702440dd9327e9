// Gift card codes
pub const GIFT_CARD_CODE_LENGTH: usize = 16;
pub const GIFT_CARD_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const GIFT_CARD_CODE_MAX_ATTEMPTS: u32 = 8;

// Installment billing
pub const INSTALLMENT_MAX_RETRIES: i32 = 3;
pub const INSTALLMENT_SWEEP_INTERVAL_SECS: u64 = 86400; // daily

// Pagination defaults
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

// Database connection pool
pub const DB_MAX_CONNECTIONS: u32 = 20;
pub const DB_MIN_CONNECTIONS: u32 = 5;
pub const DB_CONNECT_TIMEOUT_SECONDS: u64 = 30;

// Error messages
pub const ERROR_EMPTY_CART: &str = "Your cart is empty";
pub const ERROR_PRODUCT_UNAVAILABLE: &str = "This product is not available for purchase";
pub const ERROR_DISCOUNT_NOT_FOUND: &str = "Discount code not found";
pub const ERROR_DISCOUNT_INVALID: &str = "This discount code is invalid or has expired";
pub const ERROR_DISCOUNT_PRODUCT_MISMATCH: &str =
    "This discount code is not valid for the items in your cart";
pub const ERROR_GIFT_CARD_NOT_FOUND: &str = "Gift card not found";
pub const ERROR_GIFT_CARD_UNUSABLE: &str = "This gift card is inactive or has no balance";
pub const ERROR_GIFT_CARD_REDEEMED: &str = "This gift card has already been redeemed";
