//! Recording loader and payload shared by the streaming unit tests

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::math::Aabb;
use super::loader::{ChunkLoader, ChunkLoaderFactory, ChunkPayload, LoadError};
use super::node::{ChunkAddress, ChunkInfo};

/// What the "renderer" saw
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub visible: HashMap<ChunkAddress, bool>,
    pub materialized: Vec<ChunkAddress>,
    pub destroyed: Vec<ChunkAddress>,
    pub not_ready: HashSet<ChunkAddress>,
}

impl Recorder {
    pub fn shared() -> Rc<RefCell<Recorder>> {
        Rc::new(RefCell::new(Recorder::default()))
    }

    pub fn visible_set(&self) -> HashSet<ChunkAddress> {
        self.visible
            .iter()
            .filter(|&(_, &visible)| visible)
            .map(|(&address, _)| address)
            .collect()
    }
}

#[derive(Debug)]
pub(crate) struct TestPayload {
    pub address: ChunkAddress,
    pub visible: bool,
    pub ready: bool,
    recorder: Option<Rc<RefCell<Recorder>>>,
}

impl TestPayload {
    pub fn detached() -> Self {
        Self {
            address: ChunkAddress::ROOT,
            visible: false,
            ready: true,
            recorder: None,
        }
    }
}

impl ChunkPayload for TestPayload {
    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if let Some(recorder) = &self.recorder {
            recorder.borrow_mut().visible.insert(self.address, visible);
        }
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn destroy(self) {
        if let Some(recorder) = &self.recorder {
            let mut recorder = recorder.borrow_mut();
            recorder.visible.remove(&self.address);
            recorder.destroyed.push(self.address);
        }
    }
}

#[derive(Debug)]
pub(crate) struct TestLoader {
    pub info: ChunkInfo,
    pub fail_load: bool,
    pub fail_materialize: bool,
    pub exact_bbox: Option<Aabb>,
    loaded: bool,
}

impl TestLoader {
    pub fn ok(info: ChunkInfo) -> Self {
        Self {
            info,
            fail_load: false,
            fail_materialize: false,
            exact_bbox: None,
            loaded: false,
        }
    }
}

impl ChunkLoader for TestLoader {
    type Payload = TestPayload;
    type Context = Rc<RefCell<Recorder>>;

    fn load(&mut self) -> Result<(), LoadError> {
        if self.fail_load {
            return Err(LoadError::Unavailable(format!("{:?}", self.info.address)));
        }
        self.loaded = true;
        Ok(())
    }

    fn materialize(&mut self, context: &mut Self::Context) -> Result<TestPayload, LoadError> {
        assert!(self.loaded, "materialize before load");
        if self.fail_materialize {
            return Err(LoadError::Materialize(format!("{:?}", self.info.address)));
        }
        let ready = {
            let mut recorder = context.borrow_mut();
            recorder.materialized.push(self.info.address);
            !recorder.not_ready.contains(&self.info.address)
        };
        Ok(TestPayload {
            address: self.info.address,
            visible: false,
            ready,
            recorder: Some(context.clone()),
        })
    }

    fn exact_bbox(&self) -> Option<Aabb> {
        self.exact_bbox
    }
}

#[derive(Debug, Default)]
pub(crate) struct TestFactory {
    pub failing_loads: HashSet<ChunkAddress>,
    pub failing_materialize: HashSet<ChunkAddress>,
    pub exact_bboxes: HashMap<ChunkAddress, Aabb>,
    pub created: Cell<usize>,
}

impl ChunkLoaderFactory for TestFactory {
    type Loader = TestLoader;

    fn create_loader(&self, chunk: &ChunkInfo) -> TestLoader {
        self.created.set(self.created.get() + 1);
        let mut loader = TestLoader::ok(*chunk);
        loader.fail_load = self.failing_loads.contains(&chunk.address);
        loader.fail_materialize = self.failing_materialize.contains(&chunk.address);
        loader.exact_bbox = self.exact_bboxes.get(&chunk.address).copied();
        loader
    }
}
