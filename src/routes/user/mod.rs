mod handler;
mod model;

pub use handler::fetch_user_data;
