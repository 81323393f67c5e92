pub mod donations;
pub mod enums;
pub mod fees;
pub mod organizations;
pub mod splits;
