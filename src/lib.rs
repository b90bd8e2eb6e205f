// src/lib.rs
// Controlador de puzzles de xadrez: dados, árvore de lances, view-model e controlador

pub mod ceval;
pub mod config;
pub mod ctrl;
pub mod engine;
pub mod ground;
pub mod keyboard;
pub mod lines;
pub mod movetest;
pub mod prefs;
pub mod promotion;
pub mod puzzle;
pub mod server;
pub mod trans;
pub mod tree;
pub mod visual;
pub mod vm;
