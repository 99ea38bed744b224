pub mod list_routes;
pub mod maintenance_routes;
pub mod message_routes;
pub mod note_routes;
pub mod tag_routes;
pub mod thought_routes;
