pub mod protection;
pub mod quit;
pub mod whitelist;
