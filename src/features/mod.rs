pub mod geodirectory;
