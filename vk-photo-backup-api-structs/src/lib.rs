pub mod disk;
pub mod vk;
