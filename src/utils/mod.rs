pub mod clipboard;
pub mod data_url;
pub mod logging;
#[cfg(test)]
pub mod test_utils;
pub mod url;
