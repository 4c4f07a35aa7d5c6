use chrono::NaiveDate;
use rust_decimal::Decimal;

/// One purchased item read off a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    pub item_name: String,
    pub item_category: String,
    pub item_price: Decimal,
    pub location: String,
    pub date: NaiveDate,
}

/// Display-only row number emitted by the model. Never persisted.
pub const ID_COLUMN: &str = "ID";

pub const ITEM_NAME: &str = "Item Name";
pub const ITEM_CATEGORY: &str = "Item Category";
pub const ITEM_PRICE: &str = "Item Price";
pub const LOCATION: &str = "Location";
pub const DATE: &str = "Date";

/// Expected columns, in canonical order. Also the persisted column names.
pub const COLUMNS: [&str; 5] = [ITEM_NAME, ITEM_CATEGORY, ITEM_PRICE, LOCATION, DATE];

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canned extraction output used in place of the inference call in test mode.
pub const SAMPLE_OUTPUT: &str = "ID,Item Name,Item Category,Item Price,Location,Date
        1,US Tomato,Vegetable,7.00,Test Supermarket,2025-01-25
        2,Green Bell Pepper,Vegetable,1.63,Test Supermarket,2025-01-25
        3,Carrot Large & Short,Vegetable,2.92,Test Supermarket,2025-01-25
        4,Cooking Onion 2Lb,Vegetable,1.79,Test Supermarket,2025-01-25
        5,Garlic,Vegetable,0.48,Test Supermarket,2025-01-25
        6,Mini Cucumber,Vegetable,4.21,Test Supermarket,2025-01-25
        7,Snow Peas,Vegetable,3.24,Test Supermarket,2025-01-25";
