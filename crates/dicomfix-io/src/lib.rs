pub mod dicom_io;
pub mod dump;
pub mod spot_files;

mod element;

pub use dicom_io::{load_plan, open_plan_file, read_plan, save_plan, write_plan};
pub use dump::dump;
pub use spot_files::{write_racehorse, write_spot_sample, write_spotlist};
