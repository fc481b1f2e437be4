pub mod image_pyramid;
pub mod pyramidal_lucas_kanade;
pub mod shi_tomasi_selector;
