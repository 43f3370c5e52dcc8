pub mod value_network;
