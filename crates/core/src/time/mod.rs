pub mod farm_calendar;
