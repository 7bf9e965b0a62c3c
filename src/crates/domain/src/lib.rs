pub mod playlist;
pub mod song;
pub mod value;
