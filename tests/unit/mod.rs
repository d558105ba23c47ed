mod cli_store_ops;
mod table_properties;
