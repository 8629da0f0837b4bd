pub mod tinxy;
