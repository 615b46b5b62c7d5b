mod config;
mod controller;
mod element;
mod fe_manager;
mod mesh;
