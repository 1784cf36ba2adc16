use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    /// Whole currency units.
    pub price: i64,
    /// Minutes.
    pub duration: u32,
}

/// Reference data: the services customers can pick from.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceCatalog {
    services: Vec<Service>,
}

impl ServiceCatalog {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let services: Vec<Service> = serde_json::from_str(s)?;
        Self::new(services)
    }

    pub fn new(services: Vec<Service>) -> anyhow::Result<Self> {
        if services.is_empty() {
            return Err(anyhow::anyhow!("service catalog is empty"));
        }
        for (i, service) in services.iter().enumerate() {
            if service.id.trim().is_empty() {
                return Err(anyhow::anyhow!("service at position {i} has no id"));
            }
            if service.price < 0 {
                return Err(anyhow::anyhow!("service {} has a negative price", service.id));
            }
            if services[..i].iter().any(|s| s.id == service.id) {
                return Err(anyhow::anyhow!("duplicate service id: {}", service.id));
            }
        }
        Ok(Self { services })
    }

    pub fn all(&self) -> &[Service] {
        &self.services
    }

    pub fn get(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        let service = |id: &str, name: &str, price, duration| Service {
            id: id.to_string(),
            name: name.to_string(),
            price,
            duration,
        };
        Self {
            services: vec![
                service("haircut", "Standard Hair Cut", 400, 60),
                service("shaving", "Shaving", 200, 30),
                service("facemask", "Face Mask", 100, 30),
                service("beard-trim", "Beard Trim", 150, 30),
                service("hair-wash", "Hair Wash", 50, 15),
            ],
        }
    }
}
