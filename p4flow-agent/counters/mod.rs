pub mod netburst;
