#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    alexr_code_lib::run()
}
