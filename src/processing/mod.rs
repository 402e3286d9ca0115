pub mod color;
pub mod cover;
pub mod easing;
pub mod ornament;
pub mod shadow;
