pub mod tryon;
