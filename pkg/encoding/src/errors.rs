pub use failure::{err_msg, format_err, Error};

pub type Result<T> = std::result::Result<T, Error>;
