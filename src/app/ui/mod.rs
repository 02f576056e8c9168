mod controls;
mod details;
mod panels;

pub(super) use panels::draw_load_screen;
