pub(crate) mod catchers;
pub(crate) mod cors;
pub(crate) mod exchange;


pub(crate) use catchers::{
    catch_bad_request, catch_not_found, catch_server_error, catch_unprocessable,
};
pub use cors::Cors;
pub(crate) use cors::preflight;
pub(crate) use exchange::{exchange_handler, index};
