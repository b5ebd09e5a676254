pub mod square_gateway;
