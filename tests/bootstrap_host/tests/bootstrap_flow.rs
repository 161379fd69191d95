// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Integration tests for handler bootstrap against a shared region mapper
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 9 tests
//!
//! TEST_SCOPE:
//!   - camera_icp registration end to end
//!   - Degraded state and diagnostic stream on mapping failure
//!   - Overlap detection across handlers
//!   - Recipe driven bootstrap with runtime config limits
//!
//! TEST_SCENARIOS:
//!   - test_camera_icp_ready(): both regions map, memory is read-write
//!   - test_permission_denied_degrades(): first region denied, second still requested
//!   - test_second_handler_overlaps(): identical region from a second handler rejected
//!   - test_degraded_handler_does_not_block_others(): later handlers still boot
//!   - test_recipe_catalog_bootstrap(): recipes + config drive the whole startup
//!   - test_table_limit_degrades(): mapper capacity from config is enforced
//!   - test_shadow_budget_from_config(): `[mapper]` shadow budget caps the shadow mapper
//!   - test_bootstrap_runs_once(): second registration refused, nothing remapped
//!   - test_shipped_recipe_matches_plugin(): recipes/handlers agrees with camera_icp

use std::fs;
use std::path::Path;

use camera_icp::{CameraIcp, PERIPHERALS_1, SRAM_BITBAND};
use surgeon_bootstrap::{
    Bootstrapper, Handler, HandlerCatalog, HandlerState, MemorySink, RecipeHandler, RuntimeConfig,
};
use surgeon_regions::{
    AccessError, Backing, MapError, Region, RegionMapper, ShadowBacking, Status,
};

/// Shadow memory that denies access to a list of physical bases.
struct Restricted {
    denied: Vec<u64>,
    shadow: ShadowBacking,
}

impl Restricted {
    fn denying(denied: &[u64]) -> Self {
        Self { denied: denied.to_vec(), shadow: ShadowBacking::new() }
    }
}

impl Backing for Restricted {
    fn map_rw(&mut self, region: Region) -> surgeon_regions::Result<()> {
        if self.denied.contains(&region.base()) {
            return Err(MapError::PermissionDenied(region));
        }
        self.shadow.map_rw(region)
    }

    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<(), AccessError> {
        self.shadow.read(addr, buf)
    }

    fn write(&mut self, addr: u64, data: &[u8]) -> Result<(), AccessError> {
        self.shadow.write(addr, data)
    }
}

fn recipe(name: &str, body: &str) -> RecipeHandler {
    RecipeHandler::from_toml(Path::new(&format!("{name}.toml")), body).expect("recipe")
}

#[test]
fn test_camera_icp_ready() {
    let mapper = RegionMapper::new(ShadowBacking::new());
    let mut boot = Bootstrapper::new(&mapper, MemorySink::new());
    let booted = camera_icp::register(&mut boot).expect("register");

    assert_eq!(booted.state(), HandlerState::Ready);
    assert!(boot.sink().lines().is_empty());

    mapper.write(PERIPHERALS_1.0 + 0x20, &0x1234_5678u32.to_le_bytes()).expect("write");
    let mut word = [0u8; 4];
    mapper.read(PERIPHERALS_1.0 + 0x20, &mut word).expect("read");
    assert_eq!(u32::from_le_bytes(word), 0x1234_5678);
    assert!(mapper.is_mapped(SRAM_BITBAND.0));

    let report = boot.finish();
    assert!(report.is_ready());
    assert_eq!(report.get("camera_icp").unwrap().mapped, ["PERIPHERALS_1", "SRAM_BITBAND"]);
}

#[test]
fn test_permission_denied_degrades() {
    let mapper = RegionMapper::new(Restricted::denying(&[PERIPHERALS_1.0]));
    let mut boot = Bootstrapper::new(&mapper, MemorySink::new());
    let booted = camera_icp::register(&mut boot).expect("register");

    assert_eq!(booted.state(), HandlerState::Degraded);
    assert!(!booted.is_mapped("PERIPHERALS_1"));
    assert!(booted.is_mapped("SRAM_BITBAND"));
    assert_eq!(booted.report().failures[0].status, Status::PermissionDenied);

    let lines = boot.sink().lines();
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].contains("PERIPHERALS_1"));

    assert!(!mapper.is_mapped(PERIPHERALS_1.0));
    assert!(mapper.is_mapped(SRAM_BITBAND.0));
    assert_eq!(boot.finish().degraded().count(), 1);
}

#[test]
fn test_second_handler_overlaps() {
    let mapper = RegionMapper::new(ShadowBacking::new());
    let mut boot = Bootstrapper::new(&mapper, MemorySink::new());
    camera_icp::register(&mut boot).expect("camera");
    mapper.write(PERIPHERALS_1.0, &[0xa5]).expect("marker");

    let mirror = recipe(
        "mirror",
        "name = \"mirror\"\n\
         [[region]]\nname = \"PERIPHERALS_1\"\nbase = 0x40000000\nsize = 0x10000\n",
    );
    let booted = boot.bootstrap(mirror).expect("mirror");
    assert_eq!(booted.state(), HandlerState::Degraded);
    let failure = &booted.report().failures[0];
    assert_eq!(failure.status, Status::Overlap);
    let region = Region::new(PERIPHERALS_1.0, PERIPHERALS_1.1).unwrap();
    assert_eq!(failure.error, MapError::Overlap { requested: region, existing: region });

    let mapping = mapper.lookup(PERIPHERALS_1.0).unwrap();
    assert_eq!(mapping.label(), Some("camera_icp/PERIPHERALS_1"));
    let mut byte = [0u8; 1];
    mapper.read(PERIPHERALS_1.0, &mut byte).unwrap();
    assert_eq!(byte, [0xa5]);
    assert_eq!(mapper.len(), 2);
}

#[test]
fn test_degraded_handler_does_not_block_others() {
    let mapper = RegionMapper::new(Restricted::denying(&[PERIPHERALS_1.0, SRAM_BITBAND.0]));
    let mut boot = Bootstrapper::new(&mapper, MemorySink::new());
    camera_icp::register(&mut boot).expect("camera");
    let uart = recipe(
        "uart",
        "name = \"uart\"\n[[region]]\nname = \"UART0\"\nbase = 0x40011000\nsize = 0x400\n",
    );
    let booted = boot.bootstrap(uart).expect("uart");
    assert_eq!(booted.state(), HandlerState::Ready);

    let report = boot.finish();
    assert!(!report.is_ready());
    let degraded: Vec<&str> = report.degraded().map(|r| r.name.as_str()).collect();
    assert_eq!(degraded, ["camera_icp"]);
    assert_eq!(report.get("camera_icp").unwrap().failures.len(), 2);
}

#[test]
fn test_recipe_catalog_bootstrap() {
    let dir = tempfile::tempdir().unwrap();
    let recipes = dir.path().join("handlers");
    fs::create_dir(&recipes).unwrap();
    fs::write(
        recipes.join("dma.toml"),
        "name = \"dma\"\n[[region]]\nname = \"DMA1\"\nbase = 0x40020000\nsize = 0x400\n",
    )
    .unwrap();
    fs::write(
        recipes.join("gpio.toml"),
        "name = \"gpio\"\n\
         [[region]]\nname = \"GPIOA\"\nbase = 0x48000000\nsize = 0x400\n\
         [[region]]\nname = \"GPIOB\"\nbase = 0x48000400\nsize = 0x400\n",
    )
    .unwrap();
    let config_path = dir.path().join("surgeon.toml");
    fs::write(
        &config_path,
        format!("handlers = {:?}\n[mapper]\nmax_mappings = 16\n", recipes.display().to_string()),
    )
    .unwrap();

    let config = RuntimeConfig::load(&config_path).expect("config");
    let mapper = RegionMapper::shadow(config.mapper);
    let mut boot = Bootstrapper::new(&mapper, MemorySink::new());

    let catalog = HandlerCatalog::load(config.handlers.as_deref().unwrap()).expect("catalog");
    assert_eq!(catalog.names(), ["dma", "gpio"]);
    for handler in catalog.into_handlers() {
        boot.bootstrap(handler).expect("bootstrap");
    }
    camera_icp::register(&mut boot).expect("camera");

    let report = boot.finish();
    assert!(report.is_ready());
    let order: Vec<&str> = report.handlers.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(order, ["dma", "gpio", "camera_icp"]);
    assert_eq!(mapper.len(), 5);
}

#[test]
fn test_table_limit_degrades() {
    let config = RuntimeConfig::from_toml_str("[mapper]\nmax_mappings = 1\n").unwrap();
    let mapper = RegionMapper::with_config(ShadowBacking::new(), config.mapper);
    let mut boot = Bootstrapper::new(&mapper, MemorySink::new());
    let booted = camera_icp::register(&mut boot).expect("camera");
    assert_eq!(booted.state(), HandlerState::Degraded);
    assert_eq!(booted.report().failures[0].region, "SRAM_BITBAND");
    assert_eq!(booted.report().failures[0].status, Status::ResourceExhausted);
    assert!(boot.sink().lines()[0].contains("SRAM_BITBAND"));
}

#[test]
fn test_shadow_budget_from_config() {
    let config = RuntimeConfig::from_toml_str("[mapper]\nshadow_budget = 0x10000\n").unwrap();
    let mapper = RegionMapper::shadow(config.mapper);
    let mut boot = Bootstrapper::new(&mapper, MemorySink::new());
    let booted = camera_icp::register(&mut boot).expect("camera");
    assert_eq!(booted.state(), HandlerState::Degraded);
    assert!(booted.is_mapped("PERIPHERALS_1"));
    assert_eq!(booted.report().failures[0].region, "SRAM_BITBAND");
    assert_eq!(booted.report().failures[0].status, Status::ResourceExhausted);
    assert_eq!(mapper.len(), 1);
}

#[test]
fn test_bootstrap_runs_once() {
    let mapper = RegionMapper::new(ShadowBacking::new());
    let mut boot = Bootstrapper::new(&mapper, MemorySink::new());
    camera_icp::register(&mut boot).expect("first");
    let err = boot.bootstrap(CameraIcp::new()).expect_err("second");
    assert!(err.to_string().contains("already bootstrapped"));
    assert_eq!(mapper.len(), 2);
    assert!(boot.sink().lines().is_empty());
}

#[test]
fn test_shipped_recipe_matches_plugin() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../recipes/handlers");
    let catalog = HandlerCatalog::load(&dir).expect("shipped recipes");
    let recipe = catalog.get("camera_icp").expect("camera_icp recipe");
    assert_eq!(recipe.regions(), CameraIcp::new().regions());
}
