pub mod file_name;
pub mod file_type;
pub mod id;
pub mod temp_dir;
pub mod temp_file;
