pub mod bisect;
