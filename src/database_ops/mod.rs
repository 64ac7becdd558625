pub mod db;
pub mod swapi;
