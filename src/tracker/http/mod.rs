pub mod query_params;
