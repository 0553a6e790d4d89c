//! Procedural room backgrounds
//!
//! Flat-color room scenes (wall band, floor band, furniture block, vertical
//! gradient) used to seed each room category with usable templates on a
//! fresh install. A synthesized scene is just another background raster
//! feeding the same compositor as photographic templates.

use chrono::Utc;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use tracing::info;

use crate::domain::{PlacementGeometry, Region, RenderParams, SourceFormat, TemplateDescriptor};
use crate::store::{StoreError, TemplateStore};

/// A built-in scene definition
pub struct BuiltinScene {
    pub id: &'static str,
    pub room: &'static str,
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    /// Artwork drop zone
    pub drop_zone: Region,
    /// Vertical gradient: top color fading to bottom over the wall band
    pub wall_top: [u8; 3],
    pub wall_bottom: [u8; 3],
    /// Wall height as a fraction of canvas height
    pub wall_ratio: f32,
    pub floor: [u8; 3],
    /// Furniture block (x, y, w, h, color)
    pub furniture: Option<(i32, i32, u32, u32, [u8; 3])>,
}

/// Seeded scenes, a couple per room category
pub const BUILTIN_SCENES: [BuiltinScene; 12] = [
    BuiltinScene {
        id: "builtin-living-wall",
        room: "living_room",
        name: "Modern Living Room - Large Wall",
        width: 1600,
        height: 1200,
        drop_zone: Region { x: 400.0, y: 200.0, width: 800.0, height: 600.0, rotation_degrees: 0.0 },
        wall_top: [248, 249, 250],
        wall_bottom: [233, 236, 239],
        wall_ratio: 0.7,
        floor: [139, 90, 60],
        furniture: Some((100, 800, 400, 400, [139, 69, 19])),
    },
    BuiltinScene {
        id: "builtin-living-sofa",
        room: "living_room",
        name: "Cozy Living Room - Above Sofa",
        width: 1600,
        height: 1200,
        drop_zone: Region { x: 500.0, y: 150.0, width: 600.0, height: 450.0, rotation_degrees: 0.0 },
        wall_top: [255, 248, 240],
        wall_bottom: [245, 235, 224],
        wall_ratio: 0.65,
        floor: [214, 173, 125],
        furniture: Some((150, 720, 1300, 480, [139, 69, 19])),
    },
    BuiltinScene {
        id: "builtin-bedroom-bed",
        room: "bedroom",
        name: "Master Bedroom - Above Bed",
        width: 1600,
        height: 1200,
        drop_zone: Region { x: 450.0, y: 150.0, width: 700.0, height: 525.0, rotation_degrees: 0.0 },
        wall_top: [249, 249, 249],
        wall_bottom: [240, 240, 240],
        wall_ratio: 0.66,
        floor: [222, 184, 135],
        furniture: Some((200, 700, 1200, 500, [139, 115, 85])),
    },
    BuiltinScene {
        id: "builtin-bedroom-accent",
        room: "bedroom",
        name: "Modern Bedroom - Accent Wall",
        width: 1600,
        height: 1200,
        drop_zone: Region { x: 300.0, y: 180.0, width: 600.0, height: 450.0, rotation_degrees: 1.0 },
        wall_top: [255, 255, 255],
        wall_bottom: [245, 245, 245],
        wall_ratio: 0.66,
        floor: [105, 105, 105],
        furniture: Some((1000, 750, 600, 450, [105, 105, 105])),
    },
    BuiltinScene {
        id: "builtin-office-desk",
        room: "office",
        name: "Home Office - Behind Desk",
        width: 1600,
        height: 1200,
        drop_zone: Region { x: 400.0, y: 100.0, width: 800.0, height: 600.0, rotation_degrees: 0.0 },
        wall_top: [255, 255, 255],
        wall_bottom: [248, 248, 248],
        wall_ratio: 0.66,
        floor: [139, 90, 60],
        furniture: Some((200, 800, 1200, 400, [139, 69, 19])),
    },
    BuiltinScene {
        id: "builtin-office-side",
        room: "office",
        name: "Professional Office - Side Wall",
        width: 1600,
        height: 1200,
        drop_zone: Region { x: 200.0, y: 200.0, width: 600.0, height: 450.0, rotation_degrees: 0.0 },
        wall_top: [249, 249, 249],
        wall_bottom: [238, 238, 238],
        wall_ratio: 0.7,
        floor: [112, 128, 144],
        furniture: Some((900, 800, 700, 400, [47, 79, 79])),
    },
    BuiltinScene {
        id: "builtin-kitchen-counter",
        room: "kitchen",
        name: "Modern Kitchen - Above Counter",
        width: 1600,
        height: 1200,
        drop_zone: Region { x: 400.0, y: 150.0, width: 800.0, height: 600.0, rotation_degrees: 0.0 },
        wall_top: [255, 255, 255],
        wall_bottom: [248, 248, 248],
        wall_ratio: 0.7,
        floor: [222, 184, 135],
        furniture: Some((100, 850, 1400, 350, [139, 69, 19])),
    },
    BuiltinScene {
        id: "builtin-kitchen-nook",
        room: "kitchen",
        name: "Farmhouse Kitchen - Breakfast Nook",
        width: 1600,
        height: 1200,
        drop_zone: Region { x: 300.0, y: 200.0, width: 600.0, height: 450.0, rotation_degrees: 0.0 },
        wall_top: [254, 254, 254],
        wall_bottom: [240, 240, 240],
        wall_ratio: 0.66,
        floor: [160, 120, 85],
        furniture: Some((1000, 800, 600, 400, [222, 184, 135])),
    },
    BuiltinScene {
        id: "builtin-hallway-statement",
        room: "hallway",
        name: "Grand Hallway - Statement Wall",
        width: 1600,
        height: 1200,
        drop_zone: Region { x: 400.0, y: 100.0, width: 800.0, height: 600.0, rotation_degrees: 0.0 },
        wall_top: [248, 248, 248],
        wall_bottom: [238, 238, 238],
        wall_ratio: 0.75,
        floor: [139, 90, 60],
        furniture: None,
    },
    BuiltinScene {
        id: "builtin-hallway-gallery",
        room: "hallway",
        name: "Narrow Hallway - Gallery Display",
        width: 1200,
        height: 1600,
        drop_zone: Region { x: 300.0, y: 200.0, width: 600.0, height: 450.0, rotation_degrees: 0.0 },
        wall_top: [255, 255, 255],
        wall_bottom: [245, 245, 245],
        wall_ratio: 0.75,
        floor: [112, 128, 144],
        furniture: Some((50, 1250, 1100, 350, [112, 128, 144])),
    },
    BuiltinScene {
        id: "builtin-gallery-spot",
        room: "gallery",
        name: "Art Gallery - Spotlight Display",
        width: 1600,
        height: 1200,
        drop_zone: Region { x: 400.0, y: 150.0, width: 800.0, height: 600.0, rotation_degrees: 0.0 },
        wall_top: [250, 250, 250],
        wall_bottom: [244, 244, 244],
        wall_ratio: 0.83,
        floor: [47, 47, 47],
        furniture: None,
    },
    BuiltinScene {
        id: "builtin-gallery-museum",
        room: "gallery",
        name: "Museum Gallery - Professional Frame",
        width: 1600,
        height: 1200,
        drop_zone: Region { x: 300.0, y: 200.0, width: 600.0, height: 450.0, rotation_degrees: 0.0 },
        wall_top: [254, 254, 254],
        wall_bottom: [245, 245, 245],
        wall_ratio: 0.83,
        floor: [112, 128, 144],
        furniture: None,
    },
];

impl BuiltinScene {
    /// Render the scene background raster
    pub fn render(&self) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(
            self.width,
            self.height,
            Rgba([self.wall_bottom[0], self.wall_bottom[1], self.wall_bottom[2], 255]),
        );

        // Wall band with a vertical gradient for depth
        let wall_height = ((self.height as f32) * self.wall_ratio) as u32;
        for y in 0..wall_height.min(self.height) {
            let t = y as f32 / wall_height.max(1) as f32;
            let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t) as u8;
            let color = Rgba([
                lerp(self.wall_top[0], self.wall_bottom[0]),
                lerp(self.wall_top[1], self.wall_bottom[1]),
                lerp(self.wall_top[2], self.wall_bottom[2]),
                255,
            ]);
            for x in 0..self.width {
                canvas.put_pixel(x, y, color);
            }
        }

        // Floor band
        if wall_height < self.height {
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(0, wall_height as i32)
                    .of_size(self.width, self.height - wall_height),
                Rgba([self.floor[0], self.floor[1], self.floor[2], 255]),
            );
        }

        if let Some((x, y, w, h, color)) = self.furniture {
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(x, y).of_size(w, h),
                Rgba([color[0], color[1], color[2], 255]),
            );
        }

        canvas
    }
}

/// Seed every builtin scene that is not already registered.
///
/// Gives a fresh install usable templates in each room category; existing
/// templates (builtin or authored) are never overwritten.
pub async fn seed_builtin_templates(store: &TemplateStore) -> Result<usize, StoreError> {
    let mut seeded = 0;

    for scene in &BUILTIN_SCENES {
        if store.get(scene.room, scene.id).is_ok() {
            continue;
        }

        let rendered = scene.render();
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(rendered)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;

        let descriptor = TemplateDescriptor {
            id: scene.id.to_string(),
            room: scene.room.to_string(),
            display_name: scene.name.to_string(),
            description: None,
            tags: vec!["builtin".to_string()],
            width: scene.width,
            height: scene.height,
            background: "background.png".to_string(),
            geometry: PlacementGeometry::Region(scene.drop_zone),
            source: SourceFormat::Manifest,
            render: RenderParams::default(),
            created_at: Utc::now(),
        };
        store.save(descriptor, bytes, None, false).await?;
        seeded += 1;
    }

    if seeded > 0 {
        info!(count = seeded, "Seeded builtin room scenes");
    }
    Ok(seeded)
}
