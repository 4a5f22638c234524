//! Municipality list for city selection

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{EstimateError, Result};

pub const DEFAULT_CITY: &str = "Campo Grande";

/// Municipalities of Mato Grosso do Sul, used when no city file is present
pub const BUILTIN_CITIES: [&str; 79] = [
    "Água Clara",
    "Alcinópolis",
    "Amambai",
    "Anastácio",
    "Anaurilândia",
    "Angélica",
    "Antônio João",
    "Aparecida do Taboado",
    "Aquidauana",
    "Aral Moreira",
    "Bandeirantes",
    "Bataguassu",
    "Batayporã",
    "Bela Vista",
    "Bodoquena",
    "Bonito",
    "Brasilândia",
    "Caarapó",
    "Camapuã",
    "Campo Grande",
    "Caracol",
    "Cassilândia",
    "Chapadão do Sul",
    "Corguinho",
    "Coronel Sapucaia",
    "Corumbá",
    "Costa Rica",
    "Coxim",
    "Deodápolis",
    "Dois Irmãos do Buriti",
    "Douradina",
    "Dourados",
    "Eldorado",
    "Fátima do Sul",
    "Figueirão",
    "Glória de Dourados",
    "Guia Lopes da Laguna",
    "Iguatemi",
    "Inocência",
    "Itaporã",
    "Itaquiraí",
    "Ivinhema",
    "Japorã",
    "Jaraguari",
    "Jardim",
    "Jateí",
    "Juti",
    "Ladário",
    "Laguna Carapã",
    "Maracaju",
    "Miranda",
    "Mundo Novo",
    "Naviraí",
    "Nioaque",
    "Nova Alvorada do Sul",
    "Nova Andradina",
    "Novo Horizonte do Sul",
    "Paraíso das Águas",
    "Paranaíba",
    "Paranhos",
    "Pedro Gomes",
    "Ponta Porã",
    "Porto Murtinho",
    "Ribas do Rio Pardo",
    "Rio Brilhante",
    "Rio Negro",
    "Rio Verde de Mato Grosso",
    "Rochedo",
    "Santa Rita do Pardo",
    "São Gabriel do Oeste",
    "Selvíria",
    "Sete Quedas",
    "Sidrolândia",
    "Sonora",
    "Tacuru",
    "Taquarussu",
    "Terenos",
    "Três Lagoas",
    "Vicentina",
];

#[derive(Deserialize)]
struct CityFile {
    cidades: Vec<String>,
}

/// Read a `{"cidades": [...]}` file, falling back to the built-in list when
/// the file does not exist
pub fn load_cities(path: &Path) -> Result<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let file: CityFile = serde_json::from_str(&contents)?;
            Ok(file.cidades)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "city file not found, using built-in list");
            Ok(BUILTIN_CITIES.iter().map(|c| c.to_string()).collect())
        }
        Err(e) => Err(EstimateError::io(path, e)),
    }
}

/// Canonical spelling of the requested city, or the default city
pub fn resolve_city(cities: &[String], requested: Option<&str>) -> Result<String> {
    let wanted = requested.unwrap_or(DEFAULT_CITY).trim();
    cities
        .iter()
        .find(|c| c.to_lowercase() == wanted.to_lowercase())
        .cloned()
        .ok_or_else(|| EstimateError::UnknownCity(wanted.to_string()))
}
