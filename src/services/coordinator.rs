use crate::debug_if_enabled;
use crate::error::{RegistryError, Result};
use crate::events::{ParticipantRecord, RegistrySnapshot, Shape};
use crate::services::shape_source::ShapeSource;
use crate::services::store::{SharedStore, StoreChange, COUNT_KEY, WINDOWS_KEY};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type MembershipCallback = Arc<dyn Fn(&RegistrySnapshot) + Send + Sync>;
pub type ShapeCallback = Arc<dyn Fn(&Shape) + Send + Sync>;

/// Жизненный цикл участника: Unregistered -> Registered -> Deregistered (терминальное)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Unregistered,
    Registered,
    Deregistered,
}

struct CoordinatorInner {
    state: CoordinatorState,
    id: Option<u64>,
    // Собственная геометрия процесса: для своей записи он единственный авторитет
    shape: Shape,
    snapshot: RegistrySnapshot,
}

/// Участие локального процесса в общем реестре.
///
/// Все операции синхронные. Доступ к кэшу снимка сериализован мьютексом, так что
/// уведомления хранилища могут приходить из другой задачи параллельно с `tick`.
/// Колбэки вызываются уже после освобождения мьютекса.
///
/// Вызовы `tick`/`deregister` до `register` и после `deregister` ничего не делают.
pub struct WindowCoordinator {
    store: Arc<dyn SharedStore>,
    shape_source: Arc<dyn ShapeSource>,
    inner: Mutex<CoordinatorInner>,
    on_membership_changed: RwLock<Option<MembershipCallback>>,
    on_shape_changed: RwLock<Option<ShapeCallback>>,
}

impl WindowCoordinator {
    pub fn new(store: Arc<dyn SharedStore>, shape_source: Arc<dyn ShapeSource>) -> Self {
        Self {
            store,
            shape_source,
            inner: Mutex::new(CoordinatorInner {
                state: CoordinatorState::Unregistered,
                id: None,
                shape: Shape::default(),
                snapshot: RegistrySnapshot::new(),
            }),
            on_membership_changed: RwLock::new(None),
            on_shape_changed: RwLock::new(None),
        }
    }

    /// Зарегистрировать процесс и получить его id.
    ///
    /// Счётчик и снимок обновляются двумя независимыми read-modify-write без блокировок.
    /// Если два процесса регистрируются почти одновременно, они могут получить одинаковый
    /// id или затереть запись друг друга до следующей записи снимка. Это известное
    /// ограничение протокола, здесь оно сохранено как есть.
    ///
    /// Сначала пишется счётчик, потом снимок: если вторая запись не удалась, в хранилище
    /// остаётся лишь пропущенный id, а не запись процесса, который так и не зарегистрировался.
    pub fn register(&self, metadata: serde_json::Value) -> Result<u64> {
        // Источник геометрии может ходить во внешние программы: не под мьютексом
        let shape = self.shape_source.current_shape();

        let mut inner = self.inner.lock();
        match inner.state {
            CoordinatorState::Registered => {
                let id = inner.id.unwrap_or_default();
                warn!("Процесс уже зарегистрирован с id {}", id);
                return Ok(id);
            }
            CoordinatorState::Deregistered => return Err(RegistryError::Terminated),
            CoordinatorState::Unregistered => {}
        }

        let mut snapshot = self.read_snapshot()?;
        let id = self.read_count()? + 1;
        if snapshot.position_of(id).is_some() {
            warn!("id {} уже есть в снимке: вероятна гонка регистраций", id);
        }

        snapshot.push(ParticipantRecord::new(id, shape, metadata));
        let raw = snapshot.to_json()?;

        self.store.set(COUNT_KEY, &id.to_string())?;
        self.store.set(WINDOWS_KEY, &raw)?;

        info!(
            "Процесс зарегистрирован: id {}, геометрия {}, участников {}",
            id,
            shape,
            snapshot.len()
        );

        inner.state = CoordinatorState::Registered;
        inner.id = Some(id);
        inner.shape = shape;
        inner.snapshot = snapshot;
        Ok(id)
    }

    /// Убрать свою запись из снимка. Счётчик не трогается. Повторный вызов - no-op.
    pub fn deregister(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != CoordinatorState::Registered {
            debug!("deregister в состоянии {:?} - пропускаем", inner.state);
            return Ok(());
        }
        let Some(id) = inner.id else {
            return Err(RegistryError::Internal("зарегистрирован без id".to_string()));
        };

        let mut snapshot = inner.snapshot.clone();
        if snapshot.remove(id).is_some() {
            self.store.set(WINDOWS_KEY, &snapshot.to_json()?)?;
            inner.snapshot = snapshot;
        } else {
            warn!("Запись id {} не найдена в снимке при снятии с регистрации", id);
        }

        inner.state = CoordinatorState::Deregistered;
        info!("Процесс id {} снят с регистрации, осталось участников: {}", id, inner.snapshot.len());
        Ok(())
    }

    /// Проверить собственную геометрию и опубликовать её, если она изменилась.
    /// Возвращает true, если геометрия изменилась.
    pub fn tick(&self) -> Result<bool> {
        let shape = self.shape_source.current_shape();

        let mut inner = self.inner.lock();
        if inner.state != CoordinatorState::Registered {
            return Ok(false);
        }
        let Some(id) = inner.id else {
            return Ok(false);
        };

        if shape == inner.shape {
            return Ok(false);
        }

        debug_if_enabled!("Геометрия id {} изменилась: {} -> {}", id, inner.shape, shape);

        let mut snapshot = inner.snapshot.clone();
        let found = match snapshot.get_mut(id) {
            Some(record) => {
                record.shape = shape;
                true
            }
            None => false,
        };
        if found {
            self.store.set(WINDOWS_KEY, &snapshot.to_json()?)?;
            inner.snapshot = snapshot;
        } else {
            // Чужая запись снимка потеряла нашу запись; восстанавливать её здесь не берёмся
            warn!("Записи id {} нет в снимке, геометрия не опубликована", id);
        }
        inner.shape = shape;
        drop(inner);

        let callback = self.on_shape_changed.read().clone();
        if let Some(callback) = callback {
            callback(&shape);
        }
        Ok(true)
    }

    /// Снимок, записанный другим процессом. Возвращает true, если изменился состав участников.
    pub fn on_external_snapshot_change(&self, snapshot: RegistrySnapshot) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != CoordinatorState::Registered {
            debug!("Внешний снимок в состоянии {:?} - игнорируем", inner.state);
            return false;
        }

        let mut snapshot = snapshot;
        Self::dedup_logged(&mut snapshot);

        // Для своей записи источник истины - мы сами
        if let Some(id) = inner.id {
            if let Some(record) = snapshot.get_mut(id) {
                record.shape = inner.shape;
            }
        }

        let membership_changed = !inner.snapshot.same_membership(&snapshot);
        inner.snapshot = snapshot;

        if !membership_changed {
            debug_if_enabled!("Внешний снимок без изменения состава: {}", inner.snapshot);
            return false;
        }

        let current = inner.snapshot.clone();
        drop(inner);

        info!("Состав участников изменился: {}", current);
        let callback = self.on_membership_changed.read().clone();
        if let Some(callback) = callback {
            callback(&current);
        }
        true
    }

    /// Точка входа для уведомлений хранилища: интересен только ключ "windows"
    pub fn handle_store_change(&self, change: StoreChange) -> bool {
        if change.key != WINDOWS_KEY {
            debug_if_enabled!("Уведомление по ключу '{}' - пропускаем", change.key);
            return false;
        }

        let snapshot = match change.new_value {
            Some(raw) => Self::parse_or_empty(&raw),
            None => RegistrySnapshot::new(),
        };
        self.on_external_snapshot_change(snapshot)
    }

    /// Перечитать снимок из хранилища так, будто его только что прислал сосед.
    ///
    /// Нужен после сброса очереди уведомлений: всё, что было записано до сброса,
    /// подтягивается отсюда, а всё последующее придёт обычным уведомлением.
    pub fn resync(&self) -> Result<bool> {
        if self.state() != CoordinatorState::Registered {
            return Ok(false);
        }
        let snapshot = match self.store.get(WINDOWS_KEY)? {
            Some(raw) => Self::parse_or_empty(&raw),
            None => RegistrySnapshot::new(),
        };
        Ok(self.on_external_snapshot_change(snapshot))
    }

    pub fn get_snapshot(&self) -> RegistrySnapshot {
        self.inner.lock().snapshot.clone()
    }

    pub fn id(&self) -> Option<u64> {
        self.inner.lock().id
    }

    pub fn state(&self) -> CoordinatorState {
        self.inner.lock().state
    }

    /// Своя запись в локальном снимке
    pub fn local_record(&self) -> Option<ParticipantRecord> {
        let inner = self.inner.lock();
        inner.id.and_then(|id| inner.snapshot.get(id).cloned())
    }

    pub fn set_membership_changed_callback<F>(&self, callback: F)
    where
        F: Fn(&RegistrySnapshot) + Send + Sync + 'static,
    {
        *self.on_membership_changed.write() = Some(Arc::new(callback));
    }

    pub fn set_shape_changed_callback<F>(&self, callback: F)
    where
        F: Fn(&Shape) + Send + Sync + 'static,
    {
        *self.on_shape_changed.write() = Some(Arc::new(callback));
    }

    fn read_snapshot(&self) -> Result<RegistrySnapshot> {
        let mut snapshot = match self.store.get(WINDOWS_KEY)? {
            Some(raw) => Self::parse_or_empty(&raw),
            None => RegistrySnapshot::new(),
        };
        Self::dedup_logged(&mut snapshot);
        Ok(snapshot)
    }

    fn read_count(&self) -> Result<u64> {
        match self.store.get(COUNT_KEY)? {
            Some(raw) => Ok(raw.trim().parse::<u64>().unwrap_or_else(|e| {
                warn!("Повреждённый счётчик {:?} ({}), считаем его равным 0", raw, e);
                0
            })),
            None => Ok(0),
        }
    }

    /// Повреждённое значение не должно ронять всех участников: считаем снимок пустым
    fn parse_or_empty(raw: &str) -> RegistrySnapshot {
        match RegistrySnapshot::parse(raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("{}; считаем снимок пустым", e);
                RegistrySnapshot::new()
            }
        }
    }

    fn dedup_logged(snapshot: &mut RegistrySnapshot) {
        for dropped in snapshot.dedup_ids() {
            warn!("Повторный id {} в снимке, оставляем первое вхождение", dropped.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::shape_source::FixedShapeSource;
    use crate::services::store::{MemoryHub, MemoryStore, StoreChanges};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Weak;

    /// Хранилище, которое по команде отказывает в записи ключа "windows"
    struct WindowsWriteFails {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    impl SharedStore for WindowsWriteFails {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if key == WINDOWS_KEY && self.failing.load(Ordering::SeqCst) {
                return RegistryError::store_unavailable("запись снимка отклонена");
            }
            self.inner.set(key, value)
        }

        fn clear(&self) -> Result<()> {
            self.inner.clear()
        }
    }

    /// Источник геометрии, который сам заглядывает в координатор
    struct ReentrantShapeSource {
        coordinator: parking_lot::Mutex<Weak<WindowCoordinator>>,
        calls: AtomicUsize,
    }

    impl ShapeSource for ReentrantShapeSource {
        fn current_shape(&self) -> Shape {
            if let Some(coordinator) = self.coordinator.lock().upgrade() {
                assert!(
                    coordinator.inner.try_lock().is_some(),
                    "геометрия запрошена под мьютексом координатора"
                );
            }
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) as i32;
            Shape::new(calls, 0, 100, 100)
        }
    }

    struct Process {
        coordinator: Arc<WindowCoordinator>,
        changes: StoreChanges,
        shape: Arc<FixedShapeSource>,
        membership_calls: Arc<AtomicUsize>,
        shape_calls: Arc<AtomicUsize>,
    }

    impl Process {
        fn start(hub: &MemoryHub) -> Self {
            let (store, changes) = hub.connect();
            let shape = Arc::new(FixedShapeSource::new(Shape::new(0, 0, 640, 480)));
            let coordinator = Arc::new(WindowCoordinator::new(Arc::new(store), shape.clone()));

            let membership_calls = Arc::new(AtomicUsize::new(0));
            let shape_calls = Arc::new(AtomicUsize::new(0));
            let counter = membership_calls.clone();
            coordinator.set_membership_changed_callback(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            let counter = shape_calls.clone();
            coordinator.set_shape_changed_callback(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

            Self {
                coordinator,
                changes,
                shape,
                membership_calls,
                shape_calls,
            }
        }

        fn register(hub: &MemoryHub) -> Self {
            let process = Self::start(hub);
            process.coordinator.register(json!({})).unwrap();
            process
        }

        fn drain(&mut self) {
            while let Ok(change) = self.changes.try_recv() {
                self.coordinator.handle_store_change(change);
            }
        }
    }

    fn stored_snapshot(hub: &MemoryHub) -> RegistrySnapshot {
        RegistrySnapshot::parse(&hub.peek(WINDOWS_KEY).unwrap()).unwrap()
    }

    fn record(id: u64) -> ParticipantRecord {
        ParticipantRecord::new(id, Shape::new(0, 0, 10, 10), json!({}))
    }

    #[test]
    fn sequential_registration_assigns_unique_ids() {
        let hub = MemoryHub::new();
        let processes: Vec<Process> = (0..5).map(|_| Process::register(&hub)).collect();

        let ids: Vec<u64> = processes.iter().map(|p| p.coordinator.id().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(stored_snapshot(&hub).ids().as_slice(), &[1, 2, 3, 4, 5]);
        assert_eq!(hub.peek(COUNT_KEY).as_deref(), Some("5"));
    }

    #[test]
    fn deregistration_removes_exactly_one_record() {
        let hub = MemoryHub::new();
        let mut processes: Vec<Process> = (0..4).map(|_| Process::register(&hub)).collect();
        processes[2].drain();

        processes[2].coordinator.deregister().unwrap();

        let snapshot = stored_snapshot(&hub);
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.get(3).is_none());
        assert_eq!(processes[2].coordinator.state(), CoordinatorState::Deregistered);
    }

    #[test]
    fn deregistration_is_idempotent() {
        let hub = MemoryHub::new();
        let first = Process::register(&hub);
        let mut second = Process::register(&hub);
        second.drain();

        second.coordinator.deregister().unwrap();
        let after_once = hub.peek(WINDOWS_KEY);
        second.coordinator.deregister().unwrap();

        assert_eq!(hub.peek(WINDOWS_KEY), after_once);
        assert_eq!(stored_snapshot(&hub).ids().as_slice(), &[1]);
        drop(first);
    }

    #[test]
    fn tick_fires_only_on_exact_shape_change() {
        let hub = MemoryHub::new();
        let process = Process::register(&hub);

        assert!(!process.coordinator.tick().unwrap());
        assert_eq!(process.shape_calls.load(Ordering::SeqCst), 0);

        process.shape.set_shape(Shape::new(0, 0, 641, 480));
        assert!(process.coordinator.tick().unwrap());
        assert!(!process.coordinator.tick().unwrap());
        assert_eq!(process.shape_calls.load(Ordering::SeqCst), 1);

        let stored = stored_snapshot(&hub);
        assert_eq!(stored.get(1).unwrap().shape, Shape::new(0, 0, 641, 480));
        assert_eq!(
            process.coordinator.local_record().unwrap().shape,
            Shape::new(0, 0, 641, 480)
        );
    }

    #[test]
    fn tick_publishes_changes_to_other_processes() {
        let hub = MemoryHub::new();
        let mut first = Process::register(&hub);
        let second = Process::register(&hub);
        first.drain();

        second.shape.set_shape(Shape::new(300, 200, 640, 480));
        second.coordinator.tick().unwrap();
        first.drain();

        let seen = first.coordinator.get_snapshot();
        assert_eq!(seen.get(2).unwrap().shape, Shape::new(300, 200, 640, 480));
        // Смена геометрии чужого окна - не смена состава
        assert_eq!(first.membership_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn membership_change_detected_by_id_set() {
        let hub = MemoryHub::new();
        let process = Process::register(&hub);
        let coordinator = &process.coordinator;

        assert!(coordinator.on_external_snapshot_change(vec![record(1), record(2)].into()));
        assert_eq!(process.membership_calls.load(Ordering::SeqCst), 1);

        // Тот же размер, другой id
        assert!(coordinator.on_external_snapshot_change(vec![record(1), record(3)].into()));
        assert_eq!(process.membership_calls.load(Ordering::SeqCst), 2);

        // Перестановка - состав тот же, но снимок всё равно заменяется
        assert!(!coordinator.on_external_snapshot_change(vec![record(3), record(1)].into()));
        assert_eq!(process.membership_calls.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.get_snapshot().ids().as_slice(), &[3, 1]);
    }

    #[test]
    fn external_snapshot_keeps_own_shape_authoritative() {
        let hub = MemoryHub::new();
        let process = Process::register(&hub);

        let mut stale = record(1);
        stale.shape = Shape::new(-5, -5, 1, 1);
        process.coordinator.on_external_snapshot_change(vec![stale, record(2)].into());

        let own = process.coordinator.local_record().unwrap();
        assert_eq!(own.shape, Shape::new(0, 0, 640, 480));
    }

    #[test]
    fn two_process_scenario() {
        let hub = MemoryHub::new();
        let mut p1 = Process::register(&hub);
        assert_eq!(p1.coordinator.id(), Some(1));
        assert_eq!(p1.coordinator.get_snapshot().ids().as_slice(), &[1]);

        let p2 = Process::register(&hub);
        assert_eq!(p2.coordinator.id(), Some(2));

        p1.drain();
        assert_eq!(p1.coordinator.get_snapshot().ids().as_slice(), &[1, 2]);
        assert_eq!(p1.membership_calls.load(Ordering::SeqCst), 1);
        // Свою запись писатель не слышит
        assert_eq!(p2.membership_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn register_then_deregister_leaves_counter() {
        let hub = MemoryHub::new();
        let p1 = Process::register(&hub);

        p1.coordinator.deregister().unwrap();

        assert_eq!(hub.peek(WINDOWS_KEY).as_deref(), Some("[]"));
        assert_eq!(hub.peek(COUNT_KEY).as_deref(), Some("1"));
    }

    #[test]
    fn ids_are_not_reused_after_deregistration() {
        let hub = MemoryHub::new();
        let p1 = Process::register(&hub);
        p1.coordinator.deregister().unwrap();

        let p2 = Process::register(&hub);
        assert_eq!(p2.coordinator.id(), Some(2));
    }

    #[test]
    fn malformed_values_are_treated_as_empty() {
        let hub = MemoryHub::new();
        let (vandal, _rx) = hub.connect();
        vandal.set(WINDOWS_KEY, "{definitely not a snapshot").unwrap();
        vandal.set(COUNT_KEY, "many").unwrap();

        let mut process = Process::register(&hub);
        assert_eq!(process.coordinator.id(), Some(1));
        assert_eq!(process.coordinator.get_snapshot().ids().as_slice(), &[1]);

        vandal.set(WINDOWS_KEY, "garbage").unwrap();
        process.drain();
        assert!(process.coordinator.get_snapshot().is_empty());
        assert_eq!(process.membership_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let hub = MemoryHub::new();
        let process = Process::register(&hub);

        let mut duplicate = record(2);
        duplicate.metadata = json!({"dup": true});
        process
            .coordinator
            .on_external_snapshot_change(vec![record(1), record(2), duplicate].into());

        let snapshot = process.coordinator.get_snapshot();
        assert_eq!(snapshot.ids().as_slice(), &[1, 2]);
        assert_eq!(snapshot.get(2).unwrap().metadata, json!({}));
    }

    #[test]
    fn removed_windows_key_means_empty_snapshot() {
        let hub = MemoryHub::new();
        let process = Process::register(&hub);

        assert!(process
            .coordinator
            .handle_store_change(StoreChange::new(WINDOWS_KEY, None)));
        assert!(process.coordinator.get_snapshot().is_empty());
        assert!(!process
            .coordinator
            .handle_store_change(StoreChange::new(COUNT_KEY, Some("9".to_string()))));
    }

    #[test]
    fn calls_outside_registered_state_are_noops() {
        let hub = MemoryHub::new();
        let process = Process::start(&hub);
        let coordinator = &process.coordinator;

        assert!(!coordinator.tick().unwrap());
        coordinator.deregister().unwrap();
        assert!(!coordinator.on_external_snapshot_change(vec![record(1)].into()));
        assert_eq!(coordinator.state(), CoordinatorState::Unregistered);
        assert!(hub.peek(WINDOWS_KEY).is_none());

        coordinator.register(json!({})).unwrap();
        assert_eq!(coordinator.register(json!({})).unwrap(), 1);
        coordinator.deregister().unwrap();

        process.shape.set_shape(Shape::new(9, 9, 9, 9));
        assert!(!coordinator.tick().unwrap());
        assert!(!coordinator.on_external_snapshot_change(vec![record(5)].into()));
        assert!(matches!(coordinator.register(json!({})), Err(RegistryError::Terminated)));
    }

    #[test]
    fn store_unavailable_propagates() {
        let hub = MemoryHub::new();
        let process = Process::start(&hub);
        hub.set_available(false);

        let result = process.coordinator.register(json!({}));
        assert!(matches!(result, Err(RegistryError::StoreUnavailable(_))));
        assert_eq!(process.coordinator.state(), CoordinatorState::Unregistered);

        hub.set_available(true);
        process.coordinator.register(json!({})).unwrap();
        hub.set_available(false);
        process.shape.set_shape(Shape::new(1, 1, 1, 1));
        assert!(matches!(
            process.coordinator.tick(),
            Err(RegistryError::StoreUnavailable(_))
        ));
        assert!(matches!(
            process.coordinator.deregister(),
            Err(RegistryError::StoreUnavailable(_))
        ));
        assert_eq!(process.coordinator.state(), CoordinatorState::Registered);
    }

    #[test]
    fn callbacks_may_read_snapshot() {
        let hub = MemoryHub::new();
        let process = Process::register(&hub);
        let seen = Arc::new(AtomicUsize::new(0));

        let coordinator = Arc::clone(&process.coordinator);
        let seen_in_callback = seen.clone();
        process.coordinator.set_membership_changed_callback(move |snapshot| {
            assert_eq!(coordinator.get_snapshot(), *snapshot);
            seen_in_callback.store(snapshot.len(), Ordering::SeqCst);
        });

        process
            .coordinator
            .on_external_snapshot_change(vec![record(1), record(2)].into());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn replacing_callback_discards_previous() {
        let hub = MemoryHub::new();
        let process = Process::register(&hub);
        let replaced = Arc::new(AtomicUsize::new(0));
        let counter = replaced.clone();
        process.coordinator.set_membership_changed_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        process
            .coordinator
            .on_external_snapshot_change(vec![record(1), record(2)].into());

        assert_eq!(replaced.load(Ordering::SeqCst), 1);
        assert_eq!(process.membership_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_snapshot_write_leaves_no_ghost_record() {
        let hub = MemoryHub::new();
        let (inner, _changes) = hub.connect();
        let store = Arc::new(WindowsWriteFails {
            inner,
            failing: AtomicBool::new(true),
        });
        let shape = Arc::new(FixedShapeSource::new(Shape::new(0, 0, 640, 480)));
        let coordinator = WindowCoordinator::new(store.clone(), shape);

        let result = coordinator.register(json!({}));
        assert!(matches!(result, Err(RegistryError::StoreUnavailable(_))));
        assert_eq!(coordinator.state(), CoordinatorState::Unregistered);
        assert!(hub.peek(WINDOWS_KEY).is_none());
        // Пропущенный id допустим, запись-призрак - нет
        assert_eq!(hub.peek(COUNT_KEY).as_deref(), Some("1"));

        store.failing.store(false, Ordering::SeqCst);
        assert_eq!(coordinator.register(json!({})).unwrap(), 2);
        assert_eq!(stored_snapshot(&hub).ids().as_slice(), &[2]);
    }

    #[test]
    fn shape_is_queried_outside_the_lock() {
        let hub = MemoryHub::new();
        let (store, _changes) = hub.connect();
        let source = Arc::new(ReentrantShapeSource {
            coordinator: parking_lot::Mutex::new(Weak::new()),
            calls: AtomicUsize::new(0),
        });
        let coordinator = Arc::new(WindowCoordinator::new(Arc::new(store), source.clone()));
        *source.coordinator.lock() = Arc::downgrade(&coordinator);

        coordinator.register(json!({})).unwrap();
        assert!(coordinator.tick().unwrap());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(stored_snapshot(&hub).get(1).unwrap().shape, Shape::new(1, 0, 100, 100));
    }

    #[test]
    fn resync_after_discarding_queue_catches_up() {
        let hub = MemoryHub::new();
        let mut p1 = Process::register(&hub);
        let _p2 = Process::register(&hub);

        // Очередь сброшена, не дойдя до координатора
        while p1.changes.try_recv().is_ok() {}
        assert_eq!(p1.coordinator.get_snapshot().ids().as_slice(), &[1]);

        assert!(p1.coordinator.resync().unwrap());
        assert_eq!(p1.coordinator.get_snapshot().ids().as_slice(), &[1, 2]);
        assert!(!p1.coordinator.resync().unwrap());
        assert_eq!(p1.membership_calls.load(Ordering::SeqCst), 1);
    }
}
