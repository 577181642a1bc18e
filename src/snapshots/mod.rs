pub mod preview_1;
